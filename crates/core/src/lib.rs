pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod geometry;
}

pub mod imaging {
    pub mod region_extractor;
}

pub mod detection {
    pub mod domain {
        pub mod box_decoder;
        pub mod detection;
        pub mod face_detector;
        pub mod face_estimate;
        pub mod feature_detector;
        pub mod label_map;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod frame_source;
        pub mod latest_frame_slot;
    }
    pub mod infrastructure;
}

pub mod rendering {
    pub mod domain {
        pub mod renderer;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod detection_pipeline;
    pub mod frame_pacer;
    pub mod pipeline_config;
    pub mod pipeline_logger;
    pub mod pipeline_runner;
    pub mod pipeline_state;
    pub mod startup_error;
    pub mod infrastructure {
        pub mod startup;
        pub mod threaded_runner;
    }
}
