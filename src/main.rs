use std::env;

use tracing::info;
use winit::event_loop::{ControlFlow, EventLoop};

use skinview_rust::app::ViewerApp;
use skinview_rust::config::DeviceClass;
use skinview_rust::utils::logging::init_logging;
use skinview_rust::{PageContext, ViewerModal, APP_NAME, VERSION};

const DEFAULT_PROFILE_BASE: &str = "https://laby.net";

fn page_context_from_args() -> (PageContext, String) {
    let mut ctx = PageContext::default();
    let mut base = env::var("SKINVIEW_PROFILE_BASE").unwrap_or_else(|_| DEFAULT_PROFILE_BASE.to_string());
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--uuid" => ctx.query_uuid = args.next(),
            "--name" => ctx.query_name = args.next(),
            "--profile-base" => {
                if let Some(value) = args.next() {
                    base = value;
                }
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
    }
    (ctx, base)
}

fn main() -> anyhow::Result<()> {
    init_logging();
    info!("{} {}", APP_NAME, VERSION);

    let (page, profile_base) = page_context_from_args();

    let runtime = tokio::runtime::Runtime::new()?;
    let modal = ViewerModal::new(DeviceClass::detect());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);
    let mut app = ViewerApp::new(modal, page, runtime.handle().clone(), profile_base);
    event_loop.run_app(&mut app)?;
    Ok(())
}
