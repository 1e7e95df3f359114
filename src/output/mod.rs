/// 输出系统 (Presentation & Recording)
///
/// - Overlay:  跟踪框/动作/FPS 叠加 (imageproc + ab_glyph)
/// - Recorder: Motion-JPEG AVI 录像与录像目录管理
pub mod overlay;
pub mod recorder;

pub use overlay::{floor_probability, Overlay};
pub use recorder::{normalize_recording_name, recording_folder, unique_filename, Recorder};
