//! `dv-elements` — the entities of a dynamic vehicle routing model.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`location`]    | `Location`, `Resource` (FIFO service slots), `Admission`   |
//! | [`order`]       | `Order`, `OrderStatus`, `Stop`                             |
//! | [`visit`]       | `Visit`                                                    |
//! | [`vehicle`]     | `Vehicle`, `VehicleStatus`, `Loading`                      |
//! | [`travel`]      | `TravelModel` + `NoTravel`, `ConstantTravel`, `MatrixTravel`, `MetricTravel` |
//! | [`interrupt`]   | `InterruptPolicy`, `Phase`                                 |
//! | [`registry`]    | `Registry` (owned entity storage + name lookup)            |
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                     |
//! |-----------|------------------------------------------------------------|
//! | `serde`   | Derives `Serialize`/`Deserialize` on orders and visits.    |
//! | `fx-hash` | FxHash for the registry's name → id maps.                  |

pub mod interrupt;
pub mod location;
pub mod order;
pub mod registry;
pub mod travel;
pub mod vehicle;
pub mod visit;

#[cfg(test)]
mod tests;

pub use interrupt::{InterruptPolicy, PermissiveInterrupts, Phase, StrictInterrupts};
pub use location::{Admission, Location, Resource};
pub use order::{Order, OrderStatus, Stop};
pub use registry::Registry;
pub use travel::{ConstantTravel, MatrixTravel, MetricTravel, NoTravel, TravelModel};
pub use vehicle::{LOAD_TOLERANCE, Loading, Vehicle, VehicleStatus};
pub use visit::Visit;
