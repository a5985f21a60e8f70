//! Column styling: specs, value-keyed style selection, field rendering.

mod processor;
mod spec;
mod truncate;

pub use processor::{format_value, layout, render_field};
pub use spec::{
    Aggregate, Align, Attrs, Color, Extent, HidePolicy, Select, StyleSpec, TableStyle, Transform,
    TruncateSide, WidthSpec,
};
pub use truncate::truncate;
