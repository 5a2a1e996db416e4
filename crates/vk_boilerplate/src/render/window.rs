//! Window management using GLFW
//!
//! Owns the GLFW context and window, creates the Vulkan surface, and decodes
//! GLFW events into [`Event`]s for the event bus.

use ash::vk;
use thiserror::Error;

use crate::config::WindowConfig;
use crate::events::Event;
use crate::input::{Key, Modifiers, MouseButton, MouseButtons};

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Window creation failed")]
    CreationFailed,

    #[error("GLFW reports no Vulkan support")]
    VulkanUnsupported,

    #[error("Surface creation failed: {0:?}")]
    SurfaceCreation(vk::Result),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Holds framebuffer-size changes back until they stop changing
///
/// A live border drag produces a burst of size events; only the size that
/// survives a full poll without changing is reported. Zero sizes (minimised
/// window) are withheld; the restored size is reported once it settles.
#[derive(Debug, Clone)]
pub struct ResizeCoalescer {
    delivered: (u32, u32),
    pending: Option<(u32, u32)>,
    changed_this_poll: bool,
}

impl ResizeCoalescer {
    /// Start from the size the swapchain was built for
    pub fn new(initial: (u32, u32)) -> Self {
        Self {
            delivered: initial,
            pending: None,
            changed_this_poll: false,
        }
    }

    /// Record a size event seen during the current poll
    pub fn observe(&mut self, width: u32, height: u32) {
        self.pending = Some((width, height));
        self.changed_this_poll = true;
    }

    /// Close the current poll, returning a size to deliver if one settled
    pub fn end_poll(&mut self) -> Option<(u32, u32)> {
        if std::mem::take(&mut self.changed_this_poll) {
            return None;
        }
        let size = self.pending?;
        if size.0 == 0 || size.1 == 0 {
            return None;
        }
        self.pending = None;
        if size == self.delivered {
            return None;
        }
        self.delivered = size;
        Some(size)
    }

    /// Last size handed out
    pub fn delivered(&self) -> (u32, u32) {
        self.delivered
    }
}

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resize: ResizeCoalescer,
    buttons: MouseButtons,
}

impl Window {
    /// Initialise GLFW and open a window without a client API
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|e| WindowError::InitializationFailed(format!("{e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_mouse_button_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_close_polling(true);

        let (width, height) = window.get_framebuffer_size();
        log::info!("Created window '{}' ({}x{} framebuffer)", config.title, width, height);

        Ok(Self {
            glfw,
            window,
            events,
            resize: ResizeCoalescer::new((width.max(0) as u32, height.max(0) as u32)),
            buttons: MouseButtons::empty(),
        })
    }

    /// Close requested by the user or the app
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Current framebuffer size in pixels
    pub fn framebuffer_extent(&self) -> vk::Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        vk::Extent2D {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }
    }

    /// Instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or(WindowError::VulkanUnsupported)
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::SurfaceCreation(result))
        }
    }

    /// Block until at least one event arrives
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Poll GLFW and decode this poll's events
    ///
    /// Escape requests close. Resize events are coalesced and appended last.
    pub fn poll_events(&mut self) -> Vec<Event> {
        self.glfw.poll_events();

        let mut decoded = Vec::new();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                glfw::WindowEvent::Key(key, _, action, mods) => {
                    let Some(key) = decode_key(key) else { continue };
                    let modifiers = decode_modifiers(mods);
                    decoded.push(match action {
                        glfw::Action::Release => Event::KeyUp { key, modifiers },
                        glfw::Action::Press | glfw::Action::Repeat => Event::KeyDown { key, modifiers },
                    });
                }
                glfw::WindowEvent::MouseButton(button, action, _) => {
                    let Some(button) = decode_mouse_button(button) else { continue };
                    match action {
                        glfw::Action::Press => {
                            self.buttons |= MouseButtons::from(button);
                            let (x, y) = self.window.get_cursor_pos();
                            decoded.push(Event::MouseButtonDown { button, x, y });
                        }
                        glfw::Action::Release => self.buttons -= MouseButtons::from(button),
                        glfw::Action::Repeat => {}
                    }
                }
                glfw::WindowEvent::CursorPos(x, y) => {
                    decoded.push(Event::MouseMove {
                        x,
                        y,
                        buttons: self.buttons,
                    });
                }
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    self.resize.observe(width.max(0) as u32, height.max(0) as u32);
                }
                _ => {}
            }
        }

        if let Some((width, height)) = self.resize.end_poll() {
            log::debug!("Framebuffer settled at {}x{}", width, height);
            decoded.push(Event::Resize { width, height });
        }

        decoded
    }
}

/// Map a GLFW key onto the keys the samples use
pub fn decode_key(key: glfw::Key) -> Option<Key> {
    Some(match key {
        glfw::Key::W => Key::W,
        glfw::Key::A => Key::A,
        glfw::Key::S => Key::S,
        glfw::Key::D => Key::D,
        glfw::Key::Q => Key::Q,
        glfw::Key::E => Key::E,
        glfw::Key::R => Key::R,
        glfw::Key::Space => Key::Space,
        glfw::Key::Escape => Key::Escape,
        glfw::Key::Up => Key::Up,
        glfw::Key::Down => Key::Down,
        glfw::Key::Left => Key::Left,
        glfw::Key::Right => Key::Right,
        _ => return None,
    })
}

/// Map GLFW modifier bits
pub fn decode_modifiers(mods: glfw::Modifiers) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::SHIFT, mods.contains(glfw::Modifiers::Shift));
    modifiers.set(Modifiers::CONTROL, mods.contains(glfw::Modifiers::Control));
    modifiers.set(Modifiers::ALT, mods.contains(glfw::Modifiers::Alt));
    modifiers
}

/// Map the first three GLFW buttons
pub fn decode_mouse_button(button: glfw::MouseButton) -> Option<MouseButton> {
    match button {
        glfw::MouseButton::Button1 => Some(MouseButton::Left),
        glfw::MouseButton::Button2 => Some(MouseButton::Right),
        glfw::MouseButton::Button3 => Some(MouseButton::Middle),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_burst_delivered_once_when_stable() {
        let mut coalescer = ResizeCoalescer::new((800, 600));

        // Live drag: a new size every poll
        coalescer.observe(810, 600);
        assert_eq!(coalescer.end_poll(), None);
        coalescer.observe(820, 610);
        coalescer.observe(830, 620);
        assert_eq!(coalescer.end_poll(), None);

        // Drag released; one quiet poll delivers the final size
        assert_eq!(coalescer.end_poll(), Some((830, 620)));
        assert_eq!(coalescer.end_poll(), None);
        assert_eq!(coalescer.delivered(), (830, 620));
    }

    #[test]
    fn test_zero_size_withheld_until_restored() {
        let mut coalescer = ResizeCoalescer::new((800, 600));

        coalescer.observe(0, 0);
        assert_eq!(coalescer.end_poll(), None);
        assert_eq!(coalescer.end_poll(), None);
        assert_eq!(coalescer.end_poll(), None);

        // Restored to a different size
        coalescer.observe(1024, 768);
        assert_eq!(coalescer.end_poll(), None);
        assert_eq!(coalescer.end_poll(), Some((1024, 768)));
    }

    #[test]
    fn test_restore_to_same_size_is_silent() {
        let mut coalescer = ResizeCoalescer::new((800, 600));
        coalescer.observe(0, 0);
        coalescer.end_poll();
        coalescer.observe(800, 600);
        coalescer.end_poll();
        assert_eq!(coalescer.end_poll(), None);
    }

    #[test]
    fn test_decode_input() {
        assert_eq!(decode_key(glfw::Key::W), Some(Key::W));
        assert_eq!(decode_key(glfw::Key::F12), None);
        assert_eq!(decode_mouse_button(glfw::MouseButton::Button1), Some(MouseButton::Left));

        let mods = decode_modifiers(glfw::Modifiers::Shift | glfw::Modifiers::Alt);
        assert_eq!(mods, Modifiers::SHIFT | Modifiers::ALT);
    }
}
