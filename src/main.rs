// File dialogs run on tokio tasks spawned from UI callbacks, so the main
// thread must live inside a runtime.
#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    bpmn_studio::run_app()
}
