use chrono::Utc;

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // Expose `.env` entries to `env!`/`option_env!`
    if let Err(err) = dotenv_build::output(dotenv_build::Config::default()) {
        println!("cargo:warning=failed to load .env: {err}");
    }

    let version = Utc::now().format("%Y%m%d.%H%M%S");
    println!("cargo:rustc-env=BUILD_VERSION={version}");

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
