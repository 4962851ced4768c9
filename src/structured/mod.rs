//! Structured-output recovery: staged extraction, schema-aware salvage and
//! validation of model text against a caller-declared schema.

pub mod extract;
pub mod schema;
pub mod shapes;
pub mod validator;

pub use extract::{extract_json, Extraction, Stage};
pub use schema::json_schema_from_type;
pub use shapes::{LabelShape, PathShape, PointListShape, ShapeRecognizer};
pub use validator::{OutputValidator, ValidationError};
