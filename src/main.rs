//! XJP APK Agent 入口
//!
//! Usage:
//! - Normal mode: `xjp-apk-agent`
//! - With custom port: `xjp-apk-agent --port 8080`

use xjp_apk_agent::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("XJP APK Agent - URL 转 WebView APK 构建代理");
    println!();
    println!("USAGE:");
    println!("    xjp-apk-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("EXAMPLES:");
    println!("    xjp-apk-agent                 # Normal mode (PORT env or 5000)");
    println!("    xjp-apk-agent --port 8080     # Custom port");
}

fn main() {
    let config = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    rt.block_on(async {
        xjp_apk_agent::init_and_run_agent_with_config(config).await;
    });
}
