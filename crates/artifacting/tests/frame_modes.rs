mod helper;

use artifacting::{ColorParams, FrameMode, MonitorMode, NtscLayout, SCANLINE_SAMPLES};
use helper::Pattern;

#[test]
fn no_artifacts_matches_palette() {
    let mut engine = helper::engine();
    let frame = helper::render_frame(&mut engine, &FrameMode::default(), Pattern::Bars);
    let palette = engine.corrected_palette();

    for (y, line) in frame.iter().enumerate() {
        assert_eq!(line.len(), SCANLINE_SAMPLES);
        let src = Pattern::Bars.line(y as u32);
        for (px, &p) in line.iter().zip(&src) {
            assert_eq!(*px, palette[p as usize]);
        }
    }
}

#[test]
fn lores_duplicates_even_pixels() {
    let mut engine = helper::engine();
    let frame = helper::render(&mut engine, &FrameMode::default(), Pattern::Stripes(4), false, false, true);
    let palette = engine.corrected_palette();
    let src = Pattern::Stripes(4).line(0);

    for (x, pair) in frame[0].chunks_exact(2).enumerate() {
        assert_eq!(pair, [palette[src[x * 2] as usize]; 2]);
    }
}

#[test]
fn bypass_uses_uncorrected_palette() {
    let mut engine = helper::engine();
    let mut params = *engine.color_params();
    params.gamma_correct = 2.2;
    let monitor = engine.monitor();
    engine.set_color_params(&params, None, None, monitor, 0).unwrap();
    assert!(!engine.is_gamma_identity());

    let mode = FrameMode {
        bypass_output_correction: true,
        ..FrameMode::default()
    };
    let frame = helper::render_frame(&mut engine, &mode, Pattern::Flat(0x98));
    assert_eq!(frame[0][10], engine.palette()[0x98]);
    assert_ne!(engine.palette()[0x98], engine.corrected_palette()[0x98]);
}

#[test]
fn flat_ntsc_line_has_no_artifacts() {
    let mut engine = helper::engine();
    let mode = FrameMode {
        chroma_artifacts: true,
        ..FrameMode::default()
    };
    let frame = helper::render_frame(&mut engine, &mode, Pattern::Flat(0x94));
    let expected = engine.corrected_palette()[0x94];
    assert!(frame.iter().flatten().all(|&px| px == expected));
}

#[test]
fn ntsc_stripes_produce_color() {
    let mut engine = helper::engine();
    let mode = FrameMode {
        chroma_artifacts: true,
        ..FrameMode::default()
    };
    let frame = helper::render_frame(&mut engine, &mode, Pattern::Stripes(0));
    let palette = engine.palette();
    let line = &frame[0][100..200];
    assert!(line
        .iter()
        .any(|&px| px != palette[0x0e] && px != palette[0x02]));
}

#[test]
fn hi_artifacting_doubles_width() {
    for pal in [false, true] {
        let mut engine = if pal { helper::pal_engine() } else { helper::engine() };
        let frame = helper::render_frame(&mut engine, &helper::chroma_hi(pal), Pattern::Bars);
        assert_eq!(engine.output_width(), SCANLINE_SAMPLES * 2);
        assert_eq!(frame[0].len(), SCANLINE_SAMPLES * 2);
    }
}

#[test]
fn rendering_is_deterministic() {
    let mut a = helper::pal_engine();
    let mut b = helper::pal_engine();
    let mode = helper::chroma_hi(true);
    assert_eq!(
        helper::render_frame(&mut a, &mode, Pattern::Bars),
        helper::render_frame(&mut b, &mode, Pattern::Bars)
    );
}

#[test]
fn standard_round_trip_restores_output() {
    let mut engine = helper::pal_engine();
    let first = helper::render_frame(&mut engine, &helper::chroma_hi(true), Pattern::Bars);
    helper::render_frame(&mut engine, &helper::chroma_hi(false), Pattern::Bars);
    let again = helper::render_frame(&mut engine, &helper::chroma_hi(true), Pattern::Bars);

    assert_eq!(first, again);
    assert_eq!(engine.table_builds(), 3);
}

#[test]
fn begin_frame_is_idempotent() {
    let mut engine = helper::engine();
    let mode = helper::chroma_hi(false);
    engine.begin_frame(&mode);
    engine.begin_frame(&mode);
    assert_eq!(engine.table_builds(), 1);

    let frame = helper::render_frame(&mut engine, &mode, Pattern::Stripes(3));
    let frame2 = helper::render_frame(&mut engine, &mode, Pattern::Stripes(3));
    assert_eq!(frame, frame2);
    assert_eq!(engine.table_builds(), 1);
}

#[test]
fn pal_delay_line_resets_each_frame() {
    let mut engine = helper::pal_engine();
    let mode = helper::chroma_hi(true);
    helper::render_frame(&mut engine, &mode, Pattern::Flat(0x3c));

    let a = helper::render_frame(&mut engine, &mode, Pattern::Bars);
    let b = helper::render_frame(&mut engine, &mode, Pattern::Bars);
    assert_eq!(a, b);
}

#[test]
fn ntsc_layouts_agree() {
    for hires in [false, true] {
        for include_hblank in [false, true] {
            let mut wide = helper::engine();
            wide.set_ntsc_layout(NtscLayout::Wide);
            let mut narrow = helper::engine();
            narrow.set_ntsc_layout(NtscLayout::Narrow);

            let mode = helper::chroma_hi(false);
            assert_eq!(
                helper::render(&mut wide, &mode, Pattern::Bars, hires, false, include_hblank),
                helper::render(&mut narrow, &mode, Pattern::Bars, hires, false, include_hblank),
            );
        }
    }
}

#[test]
fn ntsc_hi_without_hblank_leaves_border() {
    let mut engine = helper::engine();
    engine.begin_frame(&helper::chroma_hi(false));

    let mut dst = vec![0xdead_beef; SCANLINE_SAMPLES * 2];
    engine.artifact8(0, &mut dst, &Pattern::Bars.line(0), true, false, false);
    assert!(dst[..136].iter().all(|&px| px == 0xdead_beef));
    assert!(dst[136 + 768..].iter().all(|&px| px == 0xdead_beef));
}

#[test]
fn suspend_and_resume_restore_mode() {
    let mut engine = helper::pal_engine();
    let saved = FrameMode {
        blend_out: true,
        blend_in: true,
        expanded_range_output: true,
        ..helper::chroma_hi(true)
    };
    engine.begin_frame(&saved);
    engine.suspend_frame();

    let temporary = FrameMode {
        deinterlacing: true,
        ..FrameMode::default()
    };
    engine.begin_frame(&temporary);
    assert_eq!(engine.output_width(), SCANLINE_SAMPLES);

    engine.resume_frame();
    let mode = *engine.frame_mode();
    assert!(mode.pal && mode.chroma_artifacts_hi && mode.blend_in && mode.expanded_range_output);
    assert!(mode.deinterlacing);
    assert_eq!(engine.output_width(), SCANLINE_SAMPLES * 2);

    // nothing saved
    engine.resume_frame();
    assert_eq!(*engine.frame_mode(), mode);
}

#[test]
fn pal_line_parity_changes_cross_color() {
    let mut engine = helper::pal_engine();
    let mode = helper::chroma_hi(true);
    let src: Vec<u8> = (0..SCANLINE_SAMPLES).map(|x| if x & 1 == 0 { 0x00 } else { 0xff }).collect();

    let mut even = vec![0; SCANLINE_SAMPLES * 2];
    engine.begin_frame(&mode);
    engine.artifact8(0, &mut even, &src, true, false, true);

    let mut odd = vec![0; SCANLINE_SAMPLES * 2];
    engine.begin_frame(&mode);
    engine.artifact8(1, &mut odd, &src, true, false, true);

    assert_ne!(even, odd);
}

#[test]
fn color_params_round_trip() {
    let mut engine = helper::pal_engine();
    let first = (*engine.palette(), engine.generated_palette());

    engine
        .set_color_params(&ColorParams::ntsc(), None, None, MonitorMode::Color, 0)
        .unwrap();
    assert_ne!(*engine.palette(), first.0);

    engine
        .set_color_params(&ColorParams::pal(), None, None, MonitorMode::Color, 0)
        .unwrap();
    assert_eq!(*engine.palette(), first.0);
    assert_eq!(engine.generated_palette(), first.1);
}
