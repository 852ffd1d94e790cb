//! Server state management

use crate::config::ViewerConfig;
use crate::draw::scene::BoardScene;

/// In-memory state: active configuration and the board scene
pub struct ServerState {
    pub config: ViewerConfig,
    pub scene: BoardScene,
}

impl ServerState {
    pub fn new(config: ViewerConfig) -> Self {
        let scene = BoardScene::new(&config);
        Self { config, scene }
    }

    /// Replace the configuration and start over with an empty scene
    pub fn reconfigure(&mut self, config: ViewerConfig) {
        self.scene.dispose();
        self.scene = BoardScene::new(&config);
        self.config = config;
        log::info!(
            "reconfigured: board {}x{}x{}, {} pads per kind, {} trace segments",
            self.config.board.width,
            self.config.board.height,
            self.config.board.thickness,
            self.config.max_pads_per_kind,
            self.config.max_trace_segments
        );
    }

    /// Tear down the scene; the next request gets a fresh one
    pub fn close(&mut self) -> bool {
        let released = self.scene.dispose();
        self.scene = BoardScene::new(&self.config);
        released
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}
