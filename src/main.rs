use cardcraft::app::CardCraftApp;
use cardcraft::{cli, logger};
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        std::process::exit(cli::run(args));
    }

    // -- GUI mode -----------------------------------------------------

    // Session log (overwrites the previous session's file)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 780.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("CardCraft"),
        ..Default::default()
    };

    eframe::run_native(
        "CardCraft",
        options,
        Box::new(|cc| Box::new(CardCraftApp::new(cc))),
    )
}
