use clap::Parser;
use pcb_copper_view::config::ViewerConfig;
use pcb_copper_view::lsp::{dispatch, error_codes, Request, Response, ServerState};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Copper view server: line-delimited JSON-RPC on stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "lsp_server", version, about)]
struct Cli {
    /// JSON configuration file (missing keys keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capacity of each pad batch
    #[arg(long)]
    max_pads: Option<usize>,

    /// Capacity of the trace segment batch
    #[arg(long)]
    max_trace_segments: Option<usize>,

    /// Depth offset between copper and the substrate surface
    #[arg(long)]
    layer_offset: Option<f32>,

    /// Substrate thickness
    #[arg(long)]
    thickness: Option<f32>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::from_file(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(n) = self.max_pads {
            config.max_pads_per_kind = n;
        }
        if let Some(n) = self.max_trace_segments {
            config.max_trace_segments = n;
        }
        if let Some(offset) = self.layer_offset {
            config.layer_offset = offset;
        }
        if let Some(thickness) = self.thickness {
            config.board.thickness = thickness;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Cli::parse().into_config()?;
    log::info!(
        "starting copper view server: board {}x{}x{}, {} pads per kind, {} trace segments",
        config.board.width,
        config.board.height,
        config.board.thickness,
        config.max_pads_per_kind,
        config.max_trace_segments
    );

    let mut state = ServerState::new(config);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::error!("error reading stdin: {}", e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response_line = match serde_json::from_str::<Request>(&line) {
            Ok(request) if request.method == "Exit" => {
                let reply = Response::success(request.id, serde_json::json!({ "ok": true }));
                writeln!(stdout, "{}", reply.to_line())?;
                stdout.flush()?;
                break;
            }
            Ok(request) => {
                log::debug!("request: {}", request.method);
                dispatch(&mut state, request)
            }
            Err(e) => {
                log::warn!("failed to parse request: {}", e);
                Response::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e)).to_line()
            }
        };

        writeln!(stdout, "{}", response_line)?;
        stdout.flush()?;
    }

    state.close();
    log::info!("shutting down");
    Ok(())
}
