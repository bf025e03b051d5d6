use orbit_demo::{config::SceneConfig, flow};

fn main() -> anyhow::Result<()> {
    flow::init_logger();
    flow::run(SceneConfig::from_env())
}
