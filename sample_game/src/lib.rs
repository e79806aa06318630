//! Example game module
//!
//! Bounces a player around the arena. Edit the constants, rebuild with
//! `cargo build -p sample_game` and the running host picks the change up.

use std::ffi::c_void;

use reload_harness::HostState;

/// Start speed in arena units per second
const START_SPEED: f32 = 30.0;

/// Status codes returned to the host
const OK: i32 = 0;
const NULL_STATE: i32 = 1;

fn state_mut<'a>(state: *mut c_void) -> Option<&'a mut HostState> {
    // SAFETY: the host always passes a pointer to its live `HostState`.
    unsafe { (state as *mut HostState).as_mut() }
}

pub fn init(state: &mut HostState, is_reload: bool) {
    state.init_count += 1;
    if is_reload {
        state.reload_init_count += 1;
        return;
    }

    state.player_x = state.arena_width / 2.0;
    state.player_y = state.arena_height / 2.0;
    state.velocity_x = START_SPEED;
    state.velocity_y = START_SPEED * 0.5;
}

pub fn update(state: &mut HostState) {
    state.frame_count += 1;

    let dt = state.delta_seconds;
    state.player_x += state.velocity_x * dt;
    state.player_y += state.velocity_y * dt;

    if state.player_x < 0.0 || state.player_x > state.arena_width {
        state.velocity_x = -state.velocity_x;
        state.player_x = state.player_x.clamp(0.0, state.arena_width);
    }
    if state.player_y < 0.0 || state.player_y > state.arena_height {
        state.velocity_y = -state.velocity_y;
        state.player_y = state.player_y.clamp(0.0, state.arena_height);
    }
}

#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn initWrapper(state: *mut c_void, is_reload: bool) -> i32 {
    match state_mut(state) {
        Some(state) => {
            init(state, is_reload);
            OK
        }
        None => NULL_STATE,
    }
}

#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn updateWrapper(state: *mut c_void) -> i32 {
    match state_mut(state) {
        Some(state) => {
            update(state);
            OK
        }
        None => NULL_STATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_init_centers_player() {
        let mut state = HostState::default();
        init(&mut state, false);

        assert_eq!(state.player_x, 50.0);
        assert_eq!(state.player_y, 50.0);
        assert_eq!(state.init_count, 1);
        assert_eq!(state.reload_init_count, 0);
    }

    #[test]
    fn test_reload_init_keeps_position() {
        let mut state = HostState::default();
        state.player_x = 12.0;
        init(&mut state, true);

        assert_eq!(state.player_x, 12.0);
        assert_eq!(state.reload_init_count, 1);
    }

    #[test]
    fn test_player_bounces_off_walls() {
        let mut state = HostState::default();
        init(&mut state, false);
        state.player_x = state.arena_width - 0.1;
        state.velocity_x = 60.0;
        state.delta_seconds = 0.1;

        update(&mut state);

        assert_eq!(state.player_x, state.arena_width);
        assert!(state.velocity_x < 0.0);
        assert_eq!(state.frame_count, 1);
    }

    #[test]
    fn test_wrappers_reject_null_state() {
        assert_eq!(initWrapper(std::ptr::null_mut(), false), NULL_STATE);
        assert_eq!(updateWrapper(std::ptr::null_mut()), NULL_STATE);

        let mut state = HostState::default();
        let ptr = &mut state as *mut HostState as *mut c_void;
        assert_eq!(initWrapper(ptr, false), OK);
        assert_eq!(updateWrapper(ptr), OK);
        assert_eq!(state.frame_count, 1);
    }
}
