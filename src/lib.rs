pub mod config;
pub mod events;
pub mod scan;
pub mod processing {
    pub mod layout;
}
pub mod render {
    pub mod loader;
    pub mod mirror;
    pub mod surface;
    pub mod transition;
}
pub mod tasks {
    pub mod rotation;
    pub mod trash;
}
