use std::env;
use std::path::PathBuf;

use texture_slot_run::automation::{RunRequest, create_worker_channels, spawn_worker};
use texture_slot_run::capture::ScreenCapture;
use texture_slot_run::{
    AutomationConfig, CancelToken, Logger, RunStatus, Slot, TextureMap, WorkflowManager,
};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    // Defaults
    let mut mode: Option<&str> = None; // None => run
    let mut slots_path: Option<PathBuf> = None;
    let mut map_path: Option<PathBuf> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut assets_path = PathBuf::from("assets");
    let mut language = "en".to_string();
    let mut full_run = false;

    // Parse all flags (skip program name)
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return;
            }
            "--version" | "-v" => {
                println!("Texture Slot Run v{}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--screenshot" | "-s" => mode = Some("screenshot"),
            "--full" => full_run = true,
            "--slots" => slots_path = iter.next().map(PathBuf::from),
            "--map" => map_path = iter.next().map(PathBuf::from),
            "--out" => out_path = iter.next().map(PathBuf::from),
            "--assets" => {
                if let Some(path) = iter.next() {
                    assets_path = PathBuf::from(path);
                }
            }
            "--lang" => {
                if let Some(code) = iter.next() {
                    language = code.clone();
                }
            }
            other => {
                println!("❌ Unknown argument: {other}");
                print_help();
                return;
            }
        }
    }

    match mode {
        Some("screenshot") => run_screenshot(),
        _ => run_automation(slots_path, map_path, out_path, assets_path, &language, full_run),
    }
}

fn run_screenshot() {
    println!("📸 Capturing primary monitor...");
    let capture = ScreenCapture::new();
    let result = capture
        .primary_region()
        .and_then(|region| capture.grab(region));
    match result {
        Ok(image) => match image.save("cli-screenshot.png") {
            Ok(()) => println!(
                "✅ Screenshot ({}x{}) saved to cli-screenshot.png",
                image.width(),
                image.height()
            ),
            Err(e) => println!("❌ Write failed: {e}"),
        },
        Err(e) => println!("❌ Screenshot failed: {e}"),
    }
}

fn run_automation(
    slots_path: Option<PathBuf>,
    map_path: Option<PathBuf>,
    out_path: Option<PathBuf>,
    assets_path: PathBuf,
    language: &str,
    full_run: bool,
) {
    let Some(slots_path) = slots_path else {
        println!("❌ Missing --slots <file>");
        print_help();
        return;
    };

    let slots: Vec<Slot> = match std::fs::read_to_string(&slots_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(slots) => slots,
        Err(e) => {
            println!("❌ Failed to load slots from {}: {e}", slots_path.display());
            return;
        }
    };

    let previous_map: TextureMap = match &map_path {
        Some(path) if path.exists() => {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
            {
                Ok(map) => map,
                Err(e) => {
                    println!("❌ Failed to load texture map from {}: {e}", path.display());
                    return;
                }
            }
        }
        _ => TextureMap::new(),
    };

    let apply_kind = if full_run { "full" } else { "fast" };
    println!(
        "🚀 Starting {apply_kind} apply: {} slots, {} known groups",
        slots.len(),
        previous_map.len()
    );

    let logger = Logger::stdout();
    let token = CancelToken::new();
    let mut manager =
        WorkflowManager::new(assets_path, AutomationConfig::default(), token, logger);
    manager.set_language(language);

    match manager.find_app_window_and_set_region() {
        Ok(Some(_)) => {}
        Ok(None) => {
            println!("❌ App window anchor not found on any screen");
            return;
        }
        Err(e) => {
            println!("❌ Failed to locate app window: {e}");
            return;
        }
    }

    let (request_tx, request_rx, result_tx, mut result_rx) = create_worker_channels();
    let worker = spawn_worker(manager, request_rx, result_tx);
    if request_tx
        .blocking_send(RunRequest {
            slots,
            previous_map,
            full_run,
        })
        .is_err()
    {
        println!("❌ Automation worker is unavailable");
        return;
    }
    let outcome = result_rx.blocking_recv();
    drop(request_tx);
    let _ = worker.join();

    let Some(outcome) = outcome else {
        println!("❌ Automation worker exited without a result");
        return;
    };

    match outcome.status {
        RunStatus::Success => {
            let out_path = out_path
                .or(map_path)
                .unwrap_or_else(|| PathBuf::from("texture-map.json"));
            match serde_json::to_string_pretty(&outcome.texture_map)
                .map_err(|e| e.to_string())
                .and_then(|json| std::fs::write(&out_path, json).map_err(|e| e.to_string()))
            {
                Ok(()) => println!("✅ Run finished. Texture map saved to {}", out_path.display()),
                Err(e) => println!(
                    "⚠️ Run finished but saving the texture map to {} failed: {e}",
                    out_path.display()
                ),
            }
        }
        RunStatus::FastApplyFailed => {
            println!("❌ Fast apply failed: no previous texture map. Run again with --full.");
        }
        RunStatus::Halted => {
            println!("❌ Run halted. The previous texture map was left unchanged.");
        }
    }
}

fn print_help() {
    println!("🎨 Texture Slot Automation Tool");
    println!();
    println!("USAGE:");
    println!("    texture-slot-run [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    --slots <file>      Slot configuration snapshot (JSON, required for a run)");
    println!("    --map <file>        Persisted texture map from the previous run (JSON)");
    println!("    --out <file>        Where to save the updated texture map (default: --map path)");
    println!("    --full              Full apply: rebuild all group contents, ignore prior state");
    println!("    --assets <dir>      Template assets directory (default: assets)");
    println!("    --lang <code>       UI language for localized templates (default: en)");
    println!("    --screenshot, -s    Take a screenshot and save to file (cli-screenshot.png)");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    texture-slot-run --slots slots.json --map texture-map.json");
    println!("    texture-slot-run --slots slots.json --full");
    println!("    texture-slot-run --screenshot");
}
