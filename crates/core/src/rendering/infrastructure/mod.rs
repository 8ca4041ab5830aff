pub mod preview_image_renderer;
