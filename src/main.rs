fn main() -> anyhow::Result<()> {
    catalog_admin::cli::run()
}
