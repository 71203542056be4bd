//! ### English
//! Real GL contexts through surfman (EGL on Android), with glow for the GL entry points.
//!
//! ### 中文
//! 通过 surfman（Android 上为 EGL）创建真实 GL 上下文，并用 glow 提供 GL 入口。

use std::ffi::c_void;

use dpi::PhysicalSize;
use euclid::default::Size2D;
use glow::HasContext as _;
use surfman::{
    Connection, Context, ContextAttributeFlags, ContextAttributes, Device, GLVersion, Surface,
    SurfaceAccess, SurfaceType,
};

use crate::engine::error::GpuError;

use super::{ContextId, GpuBackend, GpuContext, SurfaceTarget};

/// ### English
/// Creates one surfman device + context per worker thread.
///
/// ### 中文
/// 为每个工作线程创建一个 surfman device + context。
#[derive(Clone, Debug)]
pub struct SurfmanBackend {
    gl_version: (u8, u8),
    software: bool,
}

impl Default for SurfmanBackend {
    fn default() -> Self {
        Self {
            gl_version: (3, 0),
            software: false,
        }
    }
}

impl SurfmanBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gl_version(mut self, major: u8, minor: u8) -> Self {
        self.gl_version = (major, minor);
        self
    }

    /// ### English
    /// Use the platform's software adapter instead of the hardware one.
    ///
    /// ### 中文
    /// 使用平台的软件适配器而非硬件适配器。
    pub fn software(mut self) -> Self {
        self.software = true;
        self
    }
}

impl GpuBackend for SurfmanBackend {
    fn name(&self) -> &'static str {
        if self.software {
            "surfman-software"
        } else {
            "surfman"
        }
    }

    fn create_context(&self) -> Result<Box<dyn GpuContext>, GpuError> {
        let connection = Connection::new()
            .map_err(|err| GpuError::context(format!("surfman connection: {err:?}")))?;
        let adapter = if self.software {
            connection.create_software_adapter()
        } else {
            connection.create_adapter()
        }
        .map_err(|err| GpuError::context(format!("surfman adapter: {err:?}")))?;
        let mut device = connection
            .create_device(&adapter)
            .map_err(|err| GpuError::context(format!("surfman device: {err:?}")))?;

        let attributes = ContextAttributes {
            version: GLVersion::new(self.gl_version.0, self.gl_version.1),
            flags: ContextAttributeFlags::ALPHA
                | ContextAttributeFlags::DEPTH
                | ContextAttributeFlags::STENCIL,
        };
        let descriptor = device
            .create_context_descriptor(&attributes)
            .map_err(|err| GpuError::context(format!("context descriptor: {err:?}")))?;
        let mut context = device
            .create_context(&descriptor, None)
            .map_err(|err| GpuError::context(format!("create context: {err:?}")))?;

        if let Err(err) = device.make_context_current(&context) {
            let _ = device.destroy_context(&mut context);
            return Err(GpuError::make_current(format!("{err:?}")));
        }
        let gl = unsafe {
            glow::Context::from_loader_function(|name| device.get_proc_address(&context, name))
        };

        Ok(Box::new(SurfmanContext {
            id: ContextId::next(),
            connection,
            device,
            context: Some(context),
            gl,
            surface: None,
        }))
    }
}

struct SurfmanContext {
    id: ContextId,
    connection: Connection,
    device: Device,
    /// ### English
    /// `None` once destroyed. surfman panics on drop of a live context, so it is always
    /// destroyed explicitly.
    ///
    /// ### 中文
    /// 销毁后为 `None`。surfman 在 drop 未销毁的上下文时会 panic，因此总是显式销毁。
    context: Option<Context>,
    gl: glow::Context,
    surface: Option<SurfaceTarget>,
}

impl SurfmanContext {
    /// ### English
    /// Binds the context's current surface framebuffer (surfman surfaces are FBO-backed on some
    /// platforms).
    ///
    /// ### 中文
    /// 绑定上下文当前 surface 的 framebuffer（某些平台上 surfman surface 由 FBO 承载）。
    fn bind_surface_framebuffer(&self) -> Result<(), GpuError> {
        let Some(context) = self.context.as_ref() else {
            return Err(GpuError::make_current("context was destroyed"));
        };
        let framebuffer = self
            .device
            .context_surface_info(context)
            .map_err(|err| GpuError::binding(format!("surface info: {err:?}")))?
            .and_then(|info| info.framebuffer_object);
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer);
        }
        Ok(())
    }
}

/// ### English
/// Creates the surfman surface for `target`. Takes the device mutably, as surfman requires.
///
/// ### 中文
/// 为 `target` 创建 surfman surface。按 surfman 要求可变借用 device。
fn new_surface(
    connection: &Connection,
    device: &mut Device,
    context: &Context,
    target: SurfaceTarget,
) -> Result<Surface, GpuError> {
    let surface_type = match target {
        SurfaceTarget::Offscreen(size) => SurfaceType::Generic {
            size: to_size2d(size)?,
        },
        SurfaceTarget::NativeWindow { window, size } => {
            let native_widget = unsafe {
                connection.create_native_widget_from_ptr(window as *mut c_void, to_size2d(size)?)
            };
            SurfaceType::Widget { native_widget }
        }
    };
    device
        .create_surface(context, SurfaceAccess::GPUOnly, surface_type)
        .map_err(|err| GpuError::binding(format!("create surface: {err:?}")))
}

fn to_size2d(size: PhysicalSize<u32>) -> Result<Size2D<i32>, GpuError> {
    let width = i32::try_from(size.width)
        .map_err(|_| GpuError::binding(format!("surface width {} out of range", size.width)))?;
    let height = i32::try_from(size.height)
        .map_err(|_| GpuError::binding(format!("surface height {} out of range", size.height)))?;
    Ok(Size2D::new(width, height))
}

impl GpuContext for SurfmanContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn make_current(&mut self) -> Result<(), GpuError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| GpuError::make_current("context was destroyed"))?;
        self.device
            .make_context_current(context)
            .map_err(|err| GpuError::make_current(format!("{err:?}")))
    }

    fn bind_surface(&mut self, target: SurfaceTarget) -> Result<(), GpuError> {
        self.unbind_surface()?;

        let Self {
            connection,
            device,
            context,
            ..
        } = &mut *self;
        let context = context
            .as_mut()
            .ok_or_else(|| GpuError::make_current("context was destroyed"))?;
        let surface = new_surface(connection, device, context, target)?;
        if let Err((err, mut surface)) = device.bind_surface_to_context(context, surface) {
            let _ = device.destroy_surface(context, &mut surface);
            return Err(GpuError::binding(format!("bind surface: {err:?}")));
        }
        self.surface = Some(target);
        self.bind_surface_framebuffer()
    }

    fn unbind_surface(&mut self) -> Result<(), GpuError> {
        if self.surface.take().is_none() {
            return Ok(());
        }
        let device = &self.device;
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| GpuError::make_current("context was destroyed"))?;
        let surface = device
            .unbind_surface_from_context(context)
            .map_err(|err| GpuError::binding(format!("unbind surface: {err:?}")))?;
        if let Some(mut surface) = surface {
            device
                .destroy_surface(context, &mut surface)
                .map_err(|err| GpuError::binding(format!("destroy surface: {err:?}")))?;
        }
        Ok(())
    }

    fn set_viewport(&mut self, size: PhysicalSize<u32>) {
        let width = i32::try_from(size.width).unwrap_or(i32::MAX);
        let height = i32::try_from(size.height).unwrap_or(i32::MAX);
        unsafe {
            self.gl.viewport(0, 0, width, height);
        }
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        unsafe {
            self.gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]);
            self.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT);
        }
    }

    fn gl(&self) -> Option<&glow::Context> {
        Some(&self.gl)
    }

    fn present(&mut self) -> Result<(), GpuError> {
        let Some(target) = self.surface else {
            return Err(GpuError::NoSurface);
        };
        if let SurfaceTarget::Offscreen(_) = target {
            unsafe {
                self.gl.flush();
            }
            return Ok(());
        }

        let device = &self.device;
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| GpuError::make_current("context was destroyed"))?;
        let mut surface = device
            .unbind_surface_from_context(context)
            .map_err(|err| GpuError::present(format!("unbind for present: {err:?}")))?
            .ok_or(GpuError::NoSurface)?;
        let presented = device
            .present_surface(context, &mut surface)
            .map_err(|err| GpuError::present(format!("{err:?}")));
        if let Err((err, mut surface)) = device.bind_surface_to_context(context, surface) {
            let _ = device.destroy_surface(context, &mut surface);
            self.surface = None;
            return Err(GpuError::present(format!("rebind after present: {err:?}")));
        }
        presented?;
        self.bind_surface_framebuffer()
    }

    fn destroy(&mut self) {
        if self.context.is_none() {
            return;
        }
        if let Err(err) = self.unbind_surface() {
            tracing::warn!(context = self.id.get(), "failed to release surface: {err}");
        }
        if let Some(mut context) = self.context.take() {
            if let Err(err) = self.device.destroy_context(&mut context) {
                tracing::error!(context = self.id.get(), "failed to destroy GL context: {err:?}");
            }
        }
    }
}

impl Drop for SurfmanContext {
    fn drop(&mut self) {
        self.destroy();
    }
}
