use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use facedoom_core::{classify, Expression, FaceObservation};
use std::io::Read;

// `#[zbus::proxy]` generates `FaceControlProxy` (async) and
// `FaceControlProxyBlocking`. The CLI only needs the blocking one.
#[zbus::proxy(
    interface = "org.facedoom.FaceControl1",
    default_service = "org.facedoom.FaceControl1",
    default_path = "/org/facedoom/FaceControl1"
)]
trait FaceControl {
    async fn set_enabled(&self, enabled: bool) -> zbus::Result<()>;
    async fn enabled(&self) -> zbus::Result<bool>;
    async fn list_cameras(&self) -> zbus::Result<String>;
    async fn select_camera(&self, unique_id: &str) -> zbus::Result<()>;
    async fn set_dock_render(&self, enabled: bool) -> zbus::Result<()>;
    async fn status(&self) -> zbus::Result<String>;

    #[zbus(signal)]
    async fn expression_changed(&self, code: i32) -> zbus::Result<()>;
}

#[derive(Parser)]
#[command(name = "facedoom", about = "facedoom face control CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Turn face control on
    Enable,
    /// Turn face control off
    Disable,
    /// List cameras; the selected one is marked with '*'
    Cameras,
    /// Select the camera used for face control
    Select {
        /// Camera unique id (bus info), as shown by `cameras`
        id: String,
    },
    /// Render the game into the dock icon while minimized
    Dock {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Print expression codes as the daemon sends them
    Watch,
    /// Classify a face observation from a JSON file ('-' for stdin)
    Classify {
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let proxy = connect()?;
            let status: serde_json::Value = serde_json::from_str(&proxy.status()?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Enable => {
            let proxy = connect()?;
            proxy.set_enabled(true)?;
            println!("Face control enabled");
        }
        Commands::Disable => {
            let proxy = connect()?;
            proxy.set_enabled(false)?;
            println!("Face control disabled");
        }
        Commands::Cameras => {
            let proxy = connect()?;
            let cameras: Vec<serde_json::Value> = serde_json::from_str(&proxy.list_cameras()?)?;
            if cameras.is_empty() {
                println!("No cameras found");
            }
            for camera in &cameras {
                let marker = if camera["selected"].as_bool().unwrap_or(false) { '*' } else { ' ' };
                let unique_id = match camera["bus"].as_str() {
                    Some(bus) if !bus.is_empty() => bus,
                    _ => camera["path"].as_str().unwrap_or_default(),
                };
                println!(
                    "{marker} {unique_id}  {}  {}",
                    camera["path"].as_str().unwrap_or_default(),
                    camera["name"].as_str().unwrap_or_default(),
                );
            }
        }
        Commands::Select { id } => {
            let proxy = connect()?;
            proxy.select_camera(&id)?;
            println!("Selected camera: {id}");
        }
        Commands::Dock { state } => {
            let proxy = connect()?;
            let enabled = matches!(state, Toggle::On);
            proxy.set_dock_render(enabled)?;
            println!("Dock rendering {}", if enabled { "on" } else { "off" });
        }
        Commands::Watch => {
            let proxy = connect()?;
            let face_control = if proxy.enabled()? { "on" } else { "off" };
            println!("Face control is {face_control}; waiting for expressions (Ctrl-C to stop)");
            for signal in proxy.receive_expression_changed()? {
                let code = *signal.args()?.code();
                let name = Expression::from_code(code).map_or("unknown", Expression::name);
                println!("{code:>2}  {name}");
            }
        }
        Commands::Classify { path } => classify_file(&path)?,
    }

    Ok(())
}

fn connect() -> Result<FaceControlProxyBlocking<'static>> {
    let conn = zbus::blocking::Connection::session().context("failed to connect to session bus")?;
    let proxy = FaceControlProxyBlocking::new(&conn).context("facedoomd not reachable")?;
    Ok(proxy)
}

fn classify_file(path: &str) -> Result<()> {
    let mut text = String::new();
    if path == "-" {
        std::io::stdin().read_to_string(&mut text)?;
    } else {
        text = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    }
    let face: FaceObservation =
        serde_json::from_str(&text).with_context(|| format!("invalid face observation in {path}"))?;
    let expression = classify(&face);
    tracing::debug!(?face, %expression, "classified");
    println!("{} ({})", expression.name(), expression.code());
    Ok(())
}
