mod http;

pub use self::http::{
    ApiConfig, Gateway, TransportError, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE,
    DEFAULT_TIMEOUT_MS,
};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}

impl Capabilities {
    #[must_use]
    pub fn gateway<'a>(&'a self, config: &'a ApiConfig) -> Gateway<'a> {
        Gateway::new(&self.http, config)
    }
}
