use weblog::runtime::{boot, run};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let pipeline = boot::boot()?;
    run::run(pipeline)
}
