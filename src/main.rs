use ridesharex::config::Config;
use ridesharex::engine::Engine;
use ridesharex::error::Error;
use ridesharex::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    let addr = config.listen_addr;

    let engine = Engine::from_config(config);

    serve(engine, addr).await
}
