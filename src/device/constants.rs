use uuid::Uuid;

/**
 * How long (milliseconds) to wait before checking again while bluetooth is unavailable.
 */
pub const UNAVAILABLE_RETRY_DELAY: u64 = 1000;

/**
 * How often (milliseconds) to poll the adapters for discovered peripherals.
 */
pub const DISCOVERY_POLL_DELAY: u64 = 100;

/**
 * How often (milliseconds) to check if a connected peripheral is still connected.
 */
pub const CONNECTION_POLL_DELAY: u64 = 500;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) a read from a characteristic may take.
 */
pub const READ_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * The UUID of the Bluetooth BLE service of the RC car
 */
pub const RC_CAR_SERVICE: Uuid = Uuid::from_u128(0x8922e970_329d_44cb_badb_10070ef94b1d);

/**
 * The UUID of the characteristic that accepts [speed, direction, brake] commands.
 * The profile is derived from the BBC micro:bit accelerometer characteristic.
 */
pub const RC_CAR_CONTROL_CHARACTERISTIC: Uuid = Uuid::from_u128(0xe625601e_9e55_4597_a598_76018a0d203d);

/**
 * The UUID of the characteristic that accepts the day setting.
 */
pub const RC_DAY_CHARACTERISTIC: Uuid = Uuid::from_u128(0xb2a70845_b1d1_4420_b260_fa9551bfe361);

pub const DAY_SETTING_PAYLOAD: [u8; 3] = [1, 2, 3];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_match_the_device_profile() {
        assert_eq!(RC_CAR_SERVICE.to_string(), "8922e970-329d-44cb-badb-10070ef94b1d");
        assert_eq!(RC_CAR_CONTROL_CHARACTERISTIC.to_string(), "e625601e-9e55-4597-a598-76018a0d203d");
        assert_eq!(RC_DAY_CHARACTERISTIC.to_string(), "b2a70845-b1d1-4420-b260-fa9551bfe361");
    }
}
