//! View-space geometry shared by the compositor and the input mapper.
//!
//! - `coords`: device/logical pixel conversion.
//! - `popup`: popup overlay placement and pointer offset.
//! - `spin`: cosmetic drag-rotation transform applied by the compositor.

pub mod coords;
pub mod popup;
pub mod spin;

pub use coords::{
    device_to_logical, device_to_logical_point, device_to_logical_rect, logical_to_device,
    logical_to_device_point, logical_to_device_rect,
};
pub use popup::PopupOverlay;
pub use spin::{SpinTransform, SpinTransformError};
