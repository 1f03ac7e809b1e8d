mod provider;
mod view;

#[cfg(windows)]
mod win;

pub use provider::{ImageProvider, StaticImages};
pub use view::ImageView;

#[cfg(windows)]
pub use win::{LoadedModules, ModuleWriter};
