use crate::clock::Millis;
use coffee_telemetry_protocol::SliderPosition;
use log::info;

/// Two position slider made from a pair of debounced contacts.
#[derive(Debug, Default, Clone)]
pub struct SliderButton {
    position: SliderPosition,
    updated_at: Millis,
}

impl SliderButton {
    pub fn update(&mut self, left_pressed: bool, right_pressed: bool, now: Millis) {
        let position = SliderPosition::from_contacts(left_pressed, right_pressed);
        if position != self.position {
            info!("Slider moved to {}", position.as_str());
            self.position = position;
        }
        self.updated_at = now;
    }

    pub fn position(&self) -> SliderPosition {
        self.position
    }

    pub fn state_str(&self) -> &'static str {
        self.position.as_str()
    }

    pub fn updated_at(&self) -> Millis {
        self.updated_at
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn composition() {
        let mut slider = SliderButton::default();
        assert_eq!(slider.position(), SliderPosition::None);

        for (left, right, expected) in [
            (false, false, "None"),
            (true, false, "Left"),
            (false, true, "Right"),
            (true, true, "None"),
        ] {
            slider.update(left, right, 0);
            assert_eq!(slider.state_str(), expected);
        }
    }

    #[test]
    fn records_update_time() {
        let mut slider = SliderButton::default();
        slider.update(true, false, 10);
        slider.update(true, false, 25);

        assert_eq!(slider.position(), SliderPosition::Left);
        assert_eq!(slider.updated_at(), 25);
    }
}
