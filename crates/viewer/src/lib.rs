// Library crate: the multi-pane camera and render scheduling core, plus the
// headless harness used by the demo binary and the integration tests.

pub mod capture;
pub mod error;
pub mod harness;
pub mod input;
pub mod layout;
pub mod renderer;
pub mod scheduler;
pub mod settings;
pub mod sync;
pub mod viewport;
pub mod window;

pub use capture::CaptureOptions;
pub use error::{RenderError, ViewerError, ViewerResult};
pub use input::{InputEvent, InteractiveEvent, InteractiveMode, InteractiveTool, ModifierMask};
pub use renderer::{RenderOptions, RenderView, SceneRenderer};
pub use scheduler::{IdleHandle, IdleQueue, IdleScheduler, RedrawState};
pub use settings::ViewerSettings;
pub use window::Window;
