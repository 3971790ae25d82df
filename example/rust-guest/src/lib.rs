#![no_std]

// Minimal haathi Rust guest example.
//
// This crate is meant to be compiled to `wasm32-unknown-unknown` and run with `haathi-run`.
//
// The host calls:
// - `init()` once after loading.
// - `keyDown(code)` / `keyUp(code)` for queued key events.
// - `update(millis)` once per frame.
// - `render()` once per frame.
//
// Coordinates are y-up, on the default 1280x720 surface.

use haathi_sdk::prelude::*;

const WIDTH: f32 = 1280.0;
const HEIGHT: f32 = 720.0;
const PADDLE_W: f32 = 160.0;
const BALL_R: f32 = 12.0;
const BEST_KEY: &[u8] = b"best";

static mut PADDLE_X: f32 = 560.0;
static mut PADDLE_DIR: f32 = 0.0;
static mut BALL_X: f32 = 640.0;
static mut BALL_Y: f32 = 360.0;
static mut VEL_X: f32 = 0.25;
static mut VEL_Y: f32 = 0.3;
static mut LAST_MILLIS: i64 = -1;
static mut SCORE: u32 = 0;
static mut BEST: u32 = 0;

#[unsafe(no_mangle)]
pub extern "C" fn init() {
    let mut best = [0u8; 4];
    if storage::load_len(BEST_KEY) == best.len() {
        storage::load_into(BEST_KEY, &mut best);
        unsafe { BEST = u32::from_le_bytes(best) };
    }

    audio::load(c"bounce.wav", false);
    audio::set_volume(c"bounce.wav", 0.6);
    canvas::font(c"32px sans-serif");
    system::debug_print(c"rust guest ready");
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn keyDown(code: i32) {
    match code {
        keys::ARROW_LEFT => unsafe { PADDLE_DIR = -1.0 },
        keys::ARROW_RIGHT => unsafe { PADDLE_DIR = 1.0 },
        _ => {}
    }
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn keyUp(code: i32) {
    if code == keys::ARROW_LEFT || code == keys::ARROW_RIGHT {
        unsafe { PADDLE_DIR = 0.0 };
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn update(millis: i64) {
    unsafe {
        let dt = if LAST_MILLIS < 0 {
            0.0
        } else {
            (millis - LAST_MILLIS) as f32
        };
        LAST_MILLIS = millis;

        PADDLE_X = (PADDLE_X + PADDLE_DIR * 0.6 * dt).clamp(0.0, WIDTH - PADDLE_W);
        BALL_X += VEL_X * dt;
        BALL_Y += VEL_Y * dt;

        if BALL_X < BALL_R || BALL_X > WIDTH - BALL_R {
            VEL_X = -VEL_X;
        }
        if BALL_Y > HEIGHT - BALL_R {
            VEL_Y = -VEL_Y;
        }

        // Paddle sits 40px above the bottom edge.
        let (paddle_x, ball_x, ball_y) = (PADDLE_X, BALL_X, BALL_Y);
        let at_paddle_height = (40.0..=60.0).contains(&(ball_y - BALL_R));
        let over_paddle = (paddle_x..=paddle_x + PADDLE_W).contains(&ball_x);
        if VEL_Y < 0.0 && at_paddle_height && over_paddle {
            VEL_Y = -VEL_Y;
            SCORE += 1;
            audio::play(c"bounce.wav", true);
        }

        if BALL_Y < -BALL_R {
            if SCORE > BEST {
                BEST = SCORE;
                storage::save(BEST_KEY, &BEST.to_le_bytes());
            }
            SCORE = 0;
            BALL_X = WIDTH / 2.0;
            BALL_Y = HEIGHT / 2.0;
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn render() {
    canvas::clear(c"#141428");

    let (paddle_x, ball_x, ball_y) = unsafe { (PADDLE_X, BALL_X, BALL_Y) };

    canvas::fill_style(c"rgb(255, 100, 100)");
    canvas::begin_path();
    canvas::round_rect(paddle_x, 40.0, PADDLE_W, 20.0, 8.0);
    canvas::fill();

    canvas::fill_style(c"#9cff9c");
    canvas::begin_path();
    canvas::oval(ball_x, ball_y, BALL_R, BALL_R);
    canvas::fill();
    canvas::stroke_style(c"white");
    canvas::line_width(2.0);
    canvas::stroke();

    canvas::draw_image(
        c"logo.png",
        Blit::whole(64.0, 64.0, [WIDTH - 80.0, HEIGHT - 80.0, 64.0, 64.0]),
    );

    canvas::fill_style(c"white");
    canvas::text_align(c"left");
    let (score, best) = unsafe { (SCORE, BEST) };
    canvas::fill_text(digits(score, &mut [0; 12]), 24.0, HEIGHT - 48.0, 200.0);
    canvas::text_align(c"right");
    canvas::fill_text(digits(best, &mut [0; 12]), WIDTH - 96.0, HEIGHT - 48.0, 200.0);
}

/// Format `n` as a null-terminated decimal string in `buf`.
fn digits(mut n: u32, buf: &mut [u8; 12]) -> &core::ffi::CStr {
    let mut i = buf.len() - 1;
    buf[i] = 0;
    loop {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    match core::ffi::CStr::from_bytes_with_nul(&buf[i..]) {
        Ok(s) => s,
        Err(_) => c"?",
    }
}
