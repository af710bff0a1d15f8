use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, io::Read};
use tracing::{debug, info};

use super::config::StationsConfig;
use super::records::Tiploc;

#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub type StationTable = HashMap<Tiploc, Station>;

/// The columns used from a NaPTAN `Stops.csv` row.
#[derive(Debug, Deserialize)]
struct NaptanStop {
    #[serde(rename = "ATCOCode")]
    atco_code: String,
    #[serde(rename = "CommonName")]
    common_name: String,
    #[serde(rename = "Latitude")]
    latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    longitude: Option<f64>,
    #[serde(rename = "StopType")]
    stop_type: String,
    #[serde(rename = "Status", default)]
    status: Option<String>,
}

/// Loads rail stations from a NaPTAN `Stops.csv` export.
pub fn read_naptan_stops(stops_file_path: &str, config: &StationsConfig) -> Result<StationTable> {
    info!("Reading stations from {stops_file_path}");
    let file = fs_err::File::open(stops_file_path)?;
    create_lookup(file, config)
}

/// Rail ATCO codes are the TIPLOC behind a 4 character prefix, e.g.
/// 9100YORK is YORK. Stops without coordinates are skipped.
pub fn create_lookup<R: Read>(reader: R, config: &StationsConfig) -> Result<StationTable> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut station_lookup = StationTable::new();
    let mut skipped = 0;

    for (row, result) in csv_reader.deserialize::<NaptanStop>().enumerate() {
        // Header is line 1
        let stop = result.with_context(|| format!("Invalid NaPTAN stop on line {}", row + 2))?;
        if stop.stop_type != config.stop_type {
            continue;
        }
        if stop.status.as_ref().is_some_and(|status| *status != config.status) {
            continue;
        }
        let (Some(tiploc), Some(latitude), Some(longitude)) =
            (
            stop.atco_code.get(4..).filter(|tiploc| !tiploc.is_empty()),
            stop.latitude,
            stop.longitude,
        )
        else {
            skipped += 1;
            continue;
        };
        station_lookup
            .entry(Tiploc(tiploc.to_string()))
            .or_insert_with(|| Station {
                name: stop.common_name.clone(),
                latitude,
                longitude,
            });
    }

    debug!("Skipped {skipped} stations without a TIPLOC or coordinates");
    info!("Station lookup len: {}", station_lookup.len());
    Ok(station_lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const STOPS_CSV: &str = "\
ATCOCode,CommonName,StopType,Status,Latitude,Longitude,Easting
9100YORK,York Rail Station,RLY,active,53.95813,-1.09316,459664
9100LEEDS,Leeds Rail Station,RLY,active,53.79449,-1.54781,429853
9100OLDSTN,Old Rail Station,RLY,inactive,52.0,-1.0,400000
9100NOGEO,Ungeocoded Rail Station,RLY,active,,,400000
450012345,Some Bus Stop,BCT,active,53.9,-1.1,459000
9400ZZLUKSX1,Kings Cross Entrance,RSE,active,51.53,-0.12,530000
";

    #[test]
    fn test_create_lookup_filters_rail_stations() {
        let stations = create_lookup(STOPS_CSV.as_bytes(), &StationsConfig::default()).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(
            stations.get(&Tiploc("YORK".to_string())),
            Some(&Station {
                name: "York Rail Station".to_string(),
                latitude: 53.95813,
                longitude: -1.09316,
            })
        );
        assert!(stations.contains_key(&Tiploc("LEEDS".to_string())));
    }

    #[test]
    fn test_prefix_only_atco_code_is_skipped() {
        let csv = "ATCOCode,CommonName,StopType,Latitude,Longitude\n9100,Prefix Only,RLY,53.9,-1.1\n91,Short,RLY,53.9,-1.1\n";
        let stations = create_lookup(csv.as_bytes(), &StationsConfig::default()).unwrap();
        assert!(stations.is_empty());
        assert!(!stations.contains_key(&Tiploc(String::new())));
    }

    #[test]
    fn test_status_column_is_optional() {
        let csv = "ATCOCode,CommonName,StopType,Latitude,Longitude\n9100YORK,York,RLY,53.9,-1.1\n";
        let stations = create_lookup(csv.as_bytes(), &StationsConfig::default()).unwrap();
        assert_eq!(stations.len(), 1);
    }

    #[test]
    fn test_read_naptan_stops_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STOPS_CSV.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap();

        let stations = read_naptan_stops(path, &StationsConfig::default()).unwrap();
        assert_eq!(stations.len(), 2);
        assert!(read_naptan_stops("/does/not/exist.csv", &StationsConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_row_is_an_error() {
        let csv = "ATCOCode,CommonName,StopType,Latitude,Longitude\n9100YORK,York,RLY,north,-1.1\n";
        let err = create_lookup(csv.as_bytes(), &StationsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
