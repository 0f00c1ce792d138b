//! # CLI Integration Tests
//!
//! Tests for the `daas_dump` command line: argument parsing, the compact time and
//! coordinate syntax, configuration overrides and the translation into a request.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::path::PathBuf;

    use crate::cli::{Cli, FhList, LogLevel, TimeList, parse_coord, parse_fh_list, parse_time_list};
    use crate::error::DaasError;
    use crate::params::{Coord, ForecastSpec, Level, TimeSpec, parse_time};

    fn t(s: &str) -> chrono::NaiveDateTime {
        parse_time(s).unwrap()
    }

    /// Test help output
    #[test]
    fn test_cli_help() {
        let result = Cli::try_parse_from(["daas_dump", "--help"]);
        let error = result.unwrap_err();
        assert!(error.to_string().contains("merged result"));
    }

    /// Both positionals and the output file are required
    #[test]
    fn test_cli_missing_arguments() {
        assert!(Cli::try_parse_from(["daas_dump"]).is_err());
        assert!(Cli::try_parse_from(["daas_dump", "ECMWF_P", "2023021912"]).is_err());
    }

    #[test]
    fn test_cli_basic_model_query() {
        let cli = Cli::parse_from([
            "daas_dump", "ECMWF_P", "2023021912",
            "-f", "12,24",
            "-v", "RHU",
            "-y", "20:40",
            "-x", "110:130",
            "-p", "850",
            "-e", "rhu.nc",
        ]);

        assert_eq!(cli.datasource, "ECMWF_P");
        assert_eq!(cli.inittime, TimeList(vec![TimeSpec::Point(t("2023021912"))]));
        assert_eq!(
            cli.fh,
            Some(FhList(vec![ForecastSpec::Hours(12), ForecastSpec::Hours(24)]))
        );
        assert_eq!(cli.varname, vec!["RHU"]);
        assert_eq!(cli.lat, Some(Coord::Range(20.0, 40.0)));
        assert_eq!(cli.lon, Some(Coord::Range(110.0, 130.0)));
        assert_eq!(cli.level, Some(850.0));
        assert_eq!(cli.outfile, PathBuf::from("rhu.nc"));
        assert_eq!(cli.njobs, 1);
        assert_eq!(cli.complevel, 4);
    }

    #[test]
    fn test_cli_to_select_request() {
        let cli = Cli::parse_from([
            "daas_dump", "SURF_CHN_MUL_HOR,alias_b", "2023021900:2023022000",
            "-v", "PRE_1H,TEM",
            "-l", "58457,58238",
            "--index-col", "Station_Id_C",
            "--limit-cnt", "100",
            "--distinct",
            "-e", "pre.csv",
        ]);
        let request = cli.to_select_request().unwrap();

        assert_eq!(request.datasource, vec!["SURF_CHN_MUL_HOR", "alias_b"]);
        assert_eq!(
            request.inittime,
            vec![TimeSpec::Range(t("2023021900"), t("2023022000"))]
        );
        assert_eq!(request.varname, vec!["PRE_1H,TEM"]);
        assert!(request.merge);
        assert_eq!(request.level, Level::Value(0.0));
        assert_eq!(request.modifiers.sta_ids.as_deref(), Some("58457,58238"));
        assert_eq!(request.modifiers.index_col.as_deref(), Some("Station_Id_C"));
        assert_eq!(request.modifiers.limit_cnt, Some(100));
        assert!(request.modifiers.distinct);
        assert!(!request.modifiers.wants_raw_files());
    }

    #[test]
    fn test_cli_no_level_and_download() {
        let cli = Cli::parse_from([
            "daas_dump", "NAFP_FOR_FTM_HIGH_EC_GLB", "2023021912",
            "--no-level",
            "-d", "/tmp/grib",
            "-e", "files.csv",
        ]);
        let request = cli.to_select_request().unwrap();
        assert_eq!(request.level, Level::Absent);
        assert_eq!(request.modifiers.download, Some(PathBuf::from("/tmp/grib")));
        assert!(request.modifiers.wants_raw_files());

        // --no-level conflicts with an explicit level
        assert!(
            Cli::try_parse_from([
                "daas_dump", "ECMWF_P", "2023021912", "--no-level", "-p", "500", "-e", "a.nc",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_cli_leadtime_must_be_instants() {
        let cli = Cli::parse_from([
            "daas_dump", "ECMWF_P", "2023021912",
            "--leadtime", "2023022000:2023022012",
            "-e", "a.nc",
        ]);
        assert!(matches!(
            cli.to_select_request(),
            Err(DaasError::InvalidTimeShape(_))
        ));

        let cli = Cli::parse_from([
            "daas_dump", "ECMWF_P", "2023021912",
            "--leadtime", "2023022000,2023022012",
            "-e", "a.nc",
        ]);
        let request = cli.to_select_request().unwrap();
        assert_eq!(request.leadtime, vec![t("2023022000"), t("2023022012")]);
    }

    #[test]
    fn test_cli_njobs_and_complevel_ranges() {
        let base = ["daas_dump", "ECMWF_P", "2023021912", "-e", "a.nc"];
        let with = |extra: &[&str]| {
            let mut args: Vec<&str> = base.to_vec();
            args.extend_from_slice(extra);
            Cli::try_parse_from(args)
        };

        assert_eq!(with(&["-n", "3"]).unwrap().njobs, 3);
        assert!(with(&["-n", "0"]).is_err());
        assert!(with(&["-n", "4"]).is_err());
        assert_eq!(with(&["-c", "9"]).unwrap().complevel, 9);
        assert!(with(&["-c", "10"]).is_err());
        assert_eq!(with(&["-t", "-8"]).unwrap().offset_inittime, Some(-8));
        assert_eq!(
            with(&["--log-level", "debug"]).unwrap().log_level,
            Some(LogLevel::Debug)
        );
    }

    #[test]
    fn test_cli_name_map() {
        let cli = Cli::parse_from([
            "daas_dump", "ECMWF_P", "2023021912",
            "--name-map", "TEM:t2m",
            "--name-map", "RHU:rh",
            "-e", "a.nc",
        ]);
        assert_eq!(cli.name_map.len(), 2);
        assert_eq!(cli.name_map[0].from, "TEM");
        assert_eq!(cli.name_map[1].to, "rh");

        assert!(
            Cli::try_parse_from(["daas_dump", "ECMWF_P", "2023021912", "--name-map", "TEM", "-e", "a.nc"])
                .is_err()
        );
    }

    #[test]
    fn test_parse_time_list() {
        assert_eq!(
            parse_time_list("2023021900,2023021912").unwrap(),
            TimeList(vec![
                TimeSpec::Point(t("2023021900")),
                TimeSpec::Point(t("2023021912")),
            ])
        );

        let stepped = parse_time_list("2023021900:2023022000:6h").unwrap();
        assert_eq!(stepped.0.len(), 5);
        assert_eq!(stepped.0[4], TimeSpec::Point(t("2023022000")));

        let daily = parse_time_list("2023021900:2023022300:1d").unwrap();
        assert_eq!(daily.0.len(), 5);

        let bare = parse_time_list("2023021900:2023021912:12").unwrap();
        assert_eq!(bare.0.len(), 2);

        // Test invalid formats
        assert!(parse_time_list("2023021912:2023021900").is_err()); // reversed
        assert!(parse_time_list("2023021900:2023022000:0h").is_err()); // zero step
        assert!(parse_time_list("20230219").is_ok());
        assert!(parse_time_list("yesterday").is_err());
        assert!(parse_time_list("a:b:c:d").is_err());
    }

    #[test]
    fn test_parse_time_list_step_out_of_range() {
        assert_eq!(
            parse_time_list("2023021900:2023022000:99999999999999h").unwrap_err(),
            "Step out of range"
        );
        assert_eq!(
            parse_time_list("2023021900:2023022000:999999999999999999d").unwrap_err(),
            "Step out of range"
        );

        // A step larger than the range still yields the start
        let single = parse_time_list("2023021900:2023022000:1000000h").unwrap();
        assert_eq!(single, TimeList(vec![TimeSpec::Point(t("2023021900"))]));

        assert!(
            Cli::try_parse_from([
                "daas_dump", "ECMWF_P", "2023021900:2023022000:99999999999999h", "-e", "a.nc",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_fh_list() {
        assert_eq!(parse_fh_list("24").unwrap(), FhList(vec![ForecastSpec::Hours(24)]));
        assert_eq!(
            parse_fh_list("0:72").unwrap(),
            FhList(vec![ForecastSpec::Range(0, 72)])
        );
        let stepped = parse_fh_list("0:24:6").unwrap();
        assert_eq!(
            stepped.0,
            vec![0, 6, 12, 18, 24].into_iter().map(ForecastSpec::Hours).collect::<Vec<_>>()
        );

        assert!(parse_fh_list("a").is_err());
        assert!(parse_fh_list("72:0").is_err());
    }

    #[test]
    fn test_parse_coord() {
        assert_eq!(parse_coord("120").unwrap(), Coord::Scalar(120.0));
        assert_eq!(parse_coord("120,122.5").unwrap(), Coord::List(vec![120.0, 122.5]));
        assert_eq!(parse_coord("-10:10").unwrap(), Coord::Range(-10.0, 10.0));

        assert!(parse_coord("130:110").is_err()); // min > max
        assert!(parse_coord("east").is_err());
    }

    #[test]
    fn test_client_config_from_flags() {
        let cli = Cli::parse_from([
            "daas_dump", "ECMWF_P", "2023021912",
            "--server", "10.1.2.3",
            "--port", "8080",
            "--service-node-id", "NMIC_MUSIC_CMADAAS",
            "-u", "someone",
            "-s", "secret",
            "-e", "a.nc",
        ]);
        let config = cli.client_config().unwrap();
        assert_eq!(config.endpoint(), "http://10.1.2.3:8080/music-ws/api");
        assert_eq!(config.user, "someone");
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_client_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daas.yaml");
        std::fs::write(
            &path,
            "server: 10.0.0.1\nservice_node_id: NODE\nuser: from_file\npassword: pw\n",
        )
        .unwrap();

        let path_str = path.to_str().unwrap();
        let cli = Cli::parse_from([
            "daas_dump", "ECMWF_P", "2023021912",
            "--config", path_str,
            "-u", "override",
            "-e", "a.nc",
        ]);
        let config = cli.client_config().unwrap();
        assert_eq!(config.server, "10.0.0.1");
        assert_eq!(config.user, "override");
        assert_eq!(config.password, "pw");
    }
}
