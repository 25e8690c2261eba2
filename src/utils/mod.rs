pub mod html;
pub mod json_extract;
