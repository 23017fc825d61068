pub mod image_links;
pub mod plant;
