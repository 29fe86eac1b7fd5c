//! Admin console for a tour catalogue: client-side searchable, sortable
//! tables over the admin API's collections and direct-to-storage image
//! uploads through presigned grants.

pub mod catalog;
pub mod controller;
pub mod domain;
pub mod inputter;
pub mod model;
pub mod screen;
pub mod source;
pub mod table;
pub mod ui;
pub mod upload;
