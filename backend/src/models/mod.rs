pub mod forecast;
pub mod macros;
pub mod series;
pub mod station;
pub mod trip;

pub use forecast::*;
pub use series::*;
pub use station::*;
pub use trip::*;
