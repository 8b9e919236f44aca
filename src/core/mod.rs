pub mod codec;
pub mod document;
pub mod instance;
pub mod integrity;
pub mod packer;
pub mod placement;
pub mod timeline;
