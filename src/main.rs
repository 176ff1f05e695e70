use gravlens::world::BlackHoleWorld;

const DEFAULT_TABLE_PATH: &str = "resources/blackhole/blackhole_128_32_32_64_32.txt";

fn main() {
    env_logger::init();

    let table_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TABLE_PATH.to_string());

    let mut app = gravlens::default();
    app.attach_simulation(BlackHoleWorld::new(table_path));
    app.run();
}
