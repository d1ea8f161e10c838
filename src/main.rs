fn main() -> anyhow::Result<()> {
    eagle_sync::cli::run()
}
