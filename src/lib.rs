pub mod core {
    pub mod config;
    pub mod error;
    pub mod executor;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod models {
    pub mod rule;
    pub mod strike;
    pub mod torrent;
}

pub mod stores {
    pub mod recurring;
    pub mod ttl_cache;
}

pub mod rules {
    pub mod evaluator;
    pub mod interval;
    pub mod manager;
    pub mod striker;
}

pub mod events {
    pub mod publisher;
}

pub mod utils {
    pub mod hardlinks;
    pub mod hex;
    pub mod retry;
    pub mod size;
    pub mod time;
}

pub mod clients {
    pub mod blocklist;
    pub mod service;

    pub mod qbittorrent {
        pub mod api;
        pub mod item;
        pub mod service;
    }

    pub mod transmission {
        pub mod api;
        pub mod item;
        pub mod service;
    }

    pub mod deluge {
        pub mod api;
        pub mod item;
        pub mod service;
    }

    pub mod utorrent {
        pub mod api;
        pub mod item;
        pub mod service;
    }
}

pub mod arr {
    pub mod client;
    pub mod failed_import;
}

pub mod jobs {
    pub mod download_cleaner;
    pub mod malware_blocker;
    pub mod queue_cleaner;
}
