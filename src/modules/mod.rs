pub mod taskbar;
