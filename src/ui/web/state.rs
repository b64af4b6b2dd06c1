use std::sync::Arc;

use crate::base_system::context::Config;

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<Config>,
}
