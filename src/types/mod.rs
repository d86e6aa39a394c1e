mod value;

pub use value::{deep_eq, order_cmp, JsonValue};
