// ── Applications ──
//
// Programs the tray can drive with remote-control keys (media players and
// the like). The controller routes keypresses to them in registration order.

use cectray_api::Keypress;

use crate::error::CoreError;

/// A key-driven application registered with the controller.
pub trait Application: Send + Sync {
    /// Unique name; the registry rejects duplicates.
    fn name(&self) -> &str;

    /// Offer a keypress. Returns `true` when the application consumed it.
    ///
    /// `selected` is set when the user has this application selected in the
    /// front end and it should take keys it would otherwise ignore.
    fn handle_key(&self, key: Keypress, selected: bool) -> bool;

    /// Start when we become the active source.
    fn auto_start(&self) -> bool {
        false
    }

    fn start(&self) -> Result<(), CoreError>;

    /// Whether the front end shows a dedicated surface for this application.
    fn has_ui_surface(&self) -> bool {
        false
    }

    /// Called once on registration.
    fn initialise(&self) {}
}
