use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

/// A device list row. Selected rows stay highlighted until the device disconnects.
pub struct DeviceListItemStyleSheet {
    pub active: bool,
}

impl StyleSheet for DeviceListItemStyleSheet {
    type Style = Theme;

    fn active(&self, style: &Self::Style) -> Appearance {
        let palette = style.extended_palette();
        let (background, text_color) = if self.active {
            (palette.primary.base.color, palette.primary.base.text)
        } else {
            (Color::TRANSPARENT, palette.background.base.text)
        };

        Appearance {
            shadow_offset: Default::default(),
            background: Some(Background::Color(background)),
            text_color,
            border: Border {
                color: palette.background.strong.color,
                width: 1.0,
                radius: 4.0.into(),
            },
            shadow: Shadow::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> Appearance {
        let active = self.active(style);
        if self.active {
            return active;
        }

        Appearance {
            background: Some(Background::Color(style.extended_palette().background.weak.color)),
            ..active
        }
    }
}
