use ember_app::editor_layer::EditorLayer;
use ember_app::layer::Layer;
use ember_winit_app::app::WinitApp;

fn main() {
    let editor: Box<dyn Layer> = Box::new(EditorLayer::new());
    if let Err(e) = WinitApp::run(vec![editor]) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
