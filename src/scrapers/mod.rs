//! Page rendering and the Mineralpedia site scraper.

pub mod browser;
mod http_client;
mod http_renderer;
pub mod mineralpedia;
mod renderer;

pub use browser::{BrowserEngineConfig, BrowserRenderer};
pub use http_client::{HttpClient, HttpResponse, USER_AGENT};
pub use http_renderer::HttpRenderer;
pub use renderer::{
    PageRenderer, RenderError, RenderedPage, RendererFactory, RendererKind, RendererLease,
};
