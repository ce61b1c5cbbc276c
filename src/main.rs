//! Race Director headless demo
//!
//! Plans one round, drives it on a virtual 60 Hz host with a kinematic track,
//! and prints the result as JSON.
//!
//! Usage: race-director [1|2|3|4|dnf] [seed] [config.json | calm | standard | wild]

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use race_director::consts::PARTICIPANTS;
    use race_director::{
        DirectorOptions, DramaPreset, HeadlessTrack, Placement, RaceDirector, RoundConfig,
        VirtualHost,
    };

    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let placement = match args.first().map(|s| s.to_lowercase()) {
        Some(s) if s == "dnf" => Placement::Dnf,
        Some(s) => Placement::at(s.parse().unwrap_or(1)),
        None => Placement::Place(1),
    };
    let seed = args.get(1).cloned().unwrap_or_else(|| "demo".to_string());

    let mut config = match args.get(2) {
        Some(arg) => match DramaPreset::from_str(arg) {
            Some(preset) => RoundConfig::from_preset(preset),
            None => match RoundConfig::load(arg) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("{}", e);
                    std::process::exit(1);
                }
            },
        },
        None => RoundConfig::default(),
    };
    config.seed = seed;

    let lanes = stadium_lanes();
    let track = HeadlessTrack::new(&lanes);
    let options = DirectorOptions {
        lanes: lanes.clone(),
        base_speed: 24.0,
        player_index: 2,
    };

    let mut director = RaceDirector::new(options, config, VirtualHost::new());
    director.attach(track.speed_sink(), track.progress_source());
    director.set_outcome(placement);
    director.prime();
    director.start();

    let Some(result) = director.run_headless(&track, 1.0 / 60.0, 120.0) else {
        log::error!("Round did not resolve");
        std::process::exit(1);
    };

    let progress = track.progress();
    let arrivals = track.arrivals();
    for i in 0..PARTICIPANTS {
        let pos = lanes[i].point_at(progress[i]);
        log::info!(
            "car {}: lane {:.1} progress {:.2} at ({:.1}, {:.1}) arrived {:?}",
            i,
            lanes[i].length(),
            progress[i],
            pos.x,
            pos.y,
            arrivals[i]
        );
    }

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to encode result: {}", e),
    }
}

/// Four half-stadium lanes; outer lanes are longer
#[cfg(not(target_arch = "wasm32"))]
fn stadium_lanes() -> [race_director::Lane; race_director::consts::PARTICIPANTS] {
    use glam::Vec2;
    use race_director::Lane;
    use std::f32::consts::PI;

    const STRAIGHT: f32 = 120.0;
    const SEGMENTS: usize = 24;

    std::array::from_fn(|i| {
        let r = 40.0 + i as f32 * 6.0;
        let mut points = vec![Vec2::new(0.0, -r), Vec2::new(STRAIGHT, -r)];
        for k in 1..=SEGMENTS {
            let a = -PI / 2.0 + PI * k as f32 / SEGMENTS as f32;
            points.push(Vec2::new(STRAIGHT + r * a.cos(), r * a.sin()));
        }
        points.push(Vec2::new(0.0, r));
        Lane::new(points)
    })
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on wasm; the host page drives RaceDirector directly
}
