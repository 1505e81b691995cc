/// User interface pieces
///
/// - Relative date formatting (format.rs)
/// - Comment pin and tap overlay canvas (pins.rs)
/// - Desktop scene preview renderer (scene.rs)

pub mod format;
pub mod pins;
pub mod scene;
