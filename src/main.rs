fn main() -> anyhow::Result<()> {
    seqmc::cli::cli_main()
}
