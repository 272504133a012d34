//! Camera pin maps, one per supported board.

#[cfg(not(any(
    feature = "board-tcamera-plus-s3",
    feature = "board-xiao-s3-sense",
    feature = "board-tjournal"
)))]
compile_error!("enable one board feature: board-tcamera-plus-s3, board-xiao-s3-sense or board-tjournal");

#[cfg(any(
    all(feature = "board-tcamera-plus-s3", feature = "board-xiao-s3-sense"),
    all(feature = "board-tcamera-plus-s3", feature = "board-tjournal"),
    all(feature = "board-xiao-s3-sense", feature = "board-tjournal")
))]
compile_error!("only one board feature may be enabled");

/// GPIO numbers of the DVP camera connector, -1 for lines the board lacks.
#[derive(Debug, Clone, Copy)]
pub struct CameraPins {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sda: i32,
    pub scl: i32,
    /// D0 (Y2) .. D7 (Y9)
    pub data: [i32; 8],
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
}

#[cfg(feature = "board-tcamera-plus-s3")]
pub const BOARD: &str = "LilyGO T-Camera Plus S3";

#[cfg(feature = "board-tcamera-plus-s3")]
pub const CAMERA_PINS: CameraPins = CameraPins {
    pwdn: -1,
    reset: -1,
    xclk: 7,
    sda: 1,
    scl: 2,
    data: [12, 14, 15, 13, 11, 9, 8, 6],
    vsync: 3,
    href: 5,
    pclk: 10,
};

#[cfg(feature = "board-xiao-s3-sense")]
pub const BOARD: &str = "Seeed XIAO ESP32S3 Sense";

#[cfg(feature = "board-xiao-s3-sense")]
pub const CAMERA_PINS: CameraPins = CameraPins {
    pwdn: -1,
    reset: -1,
    xclk: 10,
    sda: 40,
    scl: 39,
    data: [15, 17, 18, 16, 14, 12, 11, 48],
    vsync: 38,
    href: 47,
    pclk: 13,
};

#[cfg(feature = "board-tjournal")]
pub const BOARD: &str = "TTGO T-Journal";

#[cfg(feature = "board-tjournal")]
pub const CAMERA_PINS: CameraPins = CameraPins {
    pwdn: -1,
    reset: 15,
    xclk: 4,
    sda: 18,
    scl: 23,
    data: [34, 13, 14, 35, 39, 38, 37, 36],
    vsync: 5,
    href: 27,
    pclk: 25,
};

impl CameraPins {
    pub fn log(&self) {
        log::info!(
            "Camera pins: PWDN={} RESET={} XCLK={} SIOD={} SIOC={}",
            self.pwdn,
            self.reset,
            self.xclk,
            self.sda,
            self.scl
        );
        log::info!(
            "             Y2..Y9={:?} VSYNC={} HREF={} PCLK={}",
            self.data,
            self.vsync,
            self.href,
            self.pclk
        );
    }
}
