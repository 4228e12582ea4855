pub mod compositor;
pub mod xdg_icons;
