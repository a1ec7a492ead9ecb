use meds_dispenser::args::TopLevelCmd;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // human-panic owns the panic hook, color-eyre only formats returned errors
    human_panic::setup_panic!();
    let (_panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install()?;

    let arg_config: TopLevelCmd = argh::from_env();

    meds_dispenser::run(arg_config).await?;

    Ok(())
}
